use std::env;
use std::path::PathBuf;

fn main() {
    let script = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap())
        .join("../../linker/virt.ld")
        .canonicalize()
        .expect("linker script missing");
    println!("cargo:rerun-if-changed={}", script.display());

    // Only the kernel target links against the virt memory map; host
    // builds (unit tests) use the platform defaults.
    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("riscv32") {
        println!("cargo:rustc-link-arg=-T{}", script.display());
    }
}
