fn main() {
    if let Err(err) = toa5_alias::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
