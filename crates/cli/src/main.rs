fn main() {
    if let Err(e) = stubdex_cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
