fn main() {
    let version = env!("CARGO_PKG_VERSION");
    println!("cargo:rustc-env=VERSION={version}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
