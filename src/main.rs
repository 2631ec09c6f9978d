use songshelf::cli::run;

fn main() -> anyhow::Result<()> {
    run()
}
