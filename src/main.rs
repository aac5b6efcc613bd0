fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = scrollscrub_lib::run(&args) {
        eprintln!("scrollscrub: {err}");
        std::process::exit(1);
    }
}
