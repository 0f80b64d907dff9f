use kinspect_core::error::InspectError;
use kinspect_core::report::Report;

pub fn print(report: &Report) -> Result<(), InspectError> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
