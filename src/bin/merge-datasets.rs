use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    reconcile::app::run_merge_datasets(std::env::args().skip(1))
}
