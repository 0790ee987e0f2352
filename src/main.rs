fn main() -> anyhow::Result<()> {
    note_manager::cli::run()
}
