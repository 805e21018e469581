use anyhow::Result;

fn main() -> Result<()> {
    passline_cli::main_entry()
}
