use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    sweetscout::cli::main()
}
