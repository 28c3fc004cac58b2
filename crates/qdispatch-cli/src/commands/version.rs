//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - backend selection and job monitoring for remote quantum providers",
        style("qdispatch").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qdispatch-hal          Provider abstraction layer");
    println!("  qdispatch-sched        Catalog, selection and monitoring");
    println!("  qdispatch-adapter-ibm  IBM Quantum provider");
    println!("  qdispatch-cli          Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
