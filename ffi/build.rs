fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let Ok(out_dir) = std::env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set, header generation skipped");
        return;
    };
    let config = cbindgen::Config::from_file(format!("{crate_dir}/cbindgen.toml")).unwrap_or_default();
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            let header = std::path::Path::new(&out_dir).join("fetcher.h");
            bindings.write_to_file(&header);
            println!("cargo:rustc-env=FETCHER_HEADER={}", header.display());
        }
        Err(e) => println!("cargo:warning=header generation skipped: {e}"),
    }
}
