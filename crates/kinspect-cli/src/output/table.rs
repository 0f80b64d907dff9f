use kinspect_core::analyze::AnalysisResult;
use kinspect_core::report::Report;
use kinspect_core::rules::schema::Severity;

pub fn print(report: &Report) {
    println!(
        "Cluster: {}  Environment: {}\n",
        report.cluster, report.environment
    );

    for result in &report.results {
        print_result(result);
    }

    let s = &report.summary;
    println!("=== Summary ===\n");
    println!("  Resources:             {}", s.total_resources);
    println!("  Resources with issues: {}", s.resources_with_issues);
    println!("  Average health score:  {:.1}", s.average_health_score);
    print!("  Findings:              {}", s.total_findings);
    if s.total_findings > 0 {
        let parts: Vec<String> = Severity::ALL
            .iter()
            .map(|sev| format!("{} {}", s.findings_by_severity.get(sev).copied().unwrap_or(0), sev))
            .collect();
        print!(" ({})", parts.join(", "));
    }
    println!();
}

fn print_result(result: &AnalysisResult) {
    println!(
        "=== {} (health {}/100) ===\n",
        result.resource, result.health_score
    );

    if result.items.is_empty() {
        println!("  No rules apply.\n");
        return;
    }

    let max_metric = result
        .items
        .iter()
        .map(|i| metric_label(i.metric.as_str(), i.subject.as_deref()).len())
        .max()
        .unwrap_or(10);

    for item in &result.items {
        let status = if item.passed { "PASS" } else { "FAIL" };
        println!(
            "  [{}] {:<8} {:<width$}  {}",
            status,
            item.severity,
            metric_label(&item.metric, item.subject.as_deref()),
            item.message,
            width = max_metric
        );
        if !item.passed && !item.remediation.is_empty() {
            println!("         -> {}", item.remediation);
        }
    }
    println!();
}

fn metric_label(metric: &str, subject: Option<&str>) -> String {
    match subject {
        Some(s) => format!("{metric}[{s}]"),
        None => metric.to_string(),
    }
}
