pub fn main() {
    std::process::exit(tinyquery_cli::run_with_args(std::env::args_os()));
}
