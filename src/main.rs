fn main() {
    if let Err(err) = sheet_workflow::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
