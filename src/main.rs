// NEO Impact Engine - headless runner

fn main() {
    if let Err(e) = neo_impact_engine::run() {
        eprintln!("neo-impact-engine: {e}");
        std::process::exit(1);
    }
}
