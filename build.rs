// Link search setup for the `linked` feature.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=ENCSHIM_ENCRYPT_LIB_DIR");
    println!("cargo:rerun-if-env-changed=ENCSHIM_ENCRYPT_LIB");

    if env::var_os("CARGO_FEATURE_LINKED").is_none() {
        return;
    }

    if let Ok(dir) = env::var("ENCSHIM_ENCRYPT_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    }
    let lib = env::var("ENCSHIM_ENCRYPT_LIB").unwrap_or_else(|_| "encrypt".to_string());
    println!("cargo:rustc-link-lib={}", lib);
}
