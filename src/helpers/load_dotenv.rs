pub fn load_dotenv() {
    // Logger isn't set up yet, and stdout is reserved for command output
    if dotenv::dotenv().is_ok() {
        eprintln!("Loaded local .env")
    }
}
