fn main() {
    if let Err(err) = case_loader::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
