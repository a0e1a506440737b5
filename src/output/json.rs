use super::{DocsOutput, FilterOutput};
use std::error::Error;

pub fn output_filter(data: &FilterOutput) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

pub fn output_docs(data: &DocsOutput) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}
