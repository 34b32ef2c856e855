fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Central proto repo is at ../proto/ relative to core/
    let proto_root = "../proto";
    let events_proto = format!("{proto_root}/virta/v1/events.proto");

    println!("cargo:rerun-if-changed={events_proto}");

    // Skip proto compilation if the source or protoc is unavailable
    // (builds then use the pre-generated file committed under src/proto/)
    if !std::path::Path::new(&events_proto).exists() {
        println!("cargo:warning=Proto source not found, using pre-generated file");
        return Ok(());
    }
    if !protoc_available() {
        println!("cargo:warning=protoc not found, using pre-generated file");
        return Ok(());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/proto")
        .compile_protos(&[&events_proto], &[proto_root])?;

    Ok(())
}

fn protoc_available() -> bool {
    if std::env::var_os("PROTOC").is_some() {
        return true;
    }
    std::process::Command::new("protoc")
        .arg("--version")
        .output()
        .is_ok()
}
