use miette::Result;
use toyvite_core::version::version_string;

pub fn run() -> Result<()> {
    println!("{}", version_string());
    Ok(())
}
