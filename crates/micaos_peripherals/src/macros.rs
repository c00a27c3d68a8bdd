/// Width of the banner macros below, in columns.
pub const BANNER_WIDTH: usize = 60;

#[macro_export]
macro_rules! print {
    ($f:ident, $($args:tt)+) => ({
        use core::fmt::Write;
        let _ = write!($f, $($args)+);
    });
}

#[macro_export]
macro_rules! println
{
	($f:ident,) => ({
		$crate::print!($f, "\r\n")
	});
	($f:ident, $fmt:expr) => ({
		$crate::print!($f, concat!($fmt, "\r\n"))
	});
	($f:ident, $fmt:expr, $($args:tt)+) => ({
		$crate::print!($f, concat!($fmt, "\r\n"), $($args)+)
	});
}

/// A horizontal rule, optionally with a centered label.
#[macro_export]
macro_rules! printhdr {
    ($f:ident,) => {{
        for _ in 0..$crate::macros::BANNER_WIDTH {
            $crate::print!($f, "-");
        }
        $crate::println!($f,);
    }};
    ($f:ident,$fmt:expr) => {{
        let len = $fmt.len() + 2;
        let side = ($crate::macros::BANNER_WIDTH.saturating_sub(len)) / 2;
        for _ in 0..side {
            $crate::print!($f, "-");
        }
        $crate::print!($f, " ");
        $crate::print!($f, $fmt);
        $crate::print!($f, " ");
        for _ in 0..side {
            $crate::print!($f, "-");
        }
        if side * 2 + len < $crate::macros::BANNER_WIDTH {
            $crate::print!($f, "-");
        }
        $crate::println!($f,);
    }};
}

/// A section title: label between two full-width rules.
#[macro_export]
macro_rules! print_title {
    ($f:ident,$fmt:expr) => {{
        $crate::printhdr!($f,);
        let side = ($crate::macros::BANNER_WIDTH.saturating_sub($fmt.len())) / 2;
        for _ in 0..side {
            $crate::print!($f, " ");
        }
        $crate::println!($f, $fmt);
        $crate::printhdr!($f,);
    }};
}
