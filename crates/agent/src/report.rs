use adkpi_core::domain::comparison::ComparisonResult;
use adkpi_core::domain::intent::Intent;
use adkpi_core::domain::metrics::MetricsResult;

pub fn render(intent: &Intent, comparison: &ComparisonResult) -> String {
    let mut out = String::new();
    let n = comparison.n_days;

    window_line(&mut out, &format!("last {n}d"), comparison.last.as_ref());
    window_line(&mut out, &format!("prior {n}d"), comparison.prior.as_ref());

    out.push_str("deltas vs prior:\n");
    for metric in &intent.metrics {
        match comparison.deltas.get(metric) {
            Some(delta) => out.push_str(&format!("  {metric:<12} {}\n", pct(delta))),
            None => out.push_str(&format!("  {metric:<12} skipped (unknown metric)\n")),
        }
    }
    out
}

fn window_line(out: &mut String, label: &str, window: Option<&MetricsResult>) {
    let Some(m) = window else {
        out.push_str(&format!("{label:<10} no data\n"));
        return;
    };
    out.push_str(&format!(
        "{label:<10} {}..{}  spend={:.2} conversions={:.2} CAC={} ROAS={}\n",
        m.start,
        m.end,
        m.spend,
        m.conversions,
        num(m.cac),
        num(m.roas),
    ));
}

fn num(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".to_string())
}

fn pct(v: Option<f64>) -> String {
    v.map(|v| format!("{v:+.2}%")).unwrap_or_else(|| "n/a".to_string())
}
