//! Basic reconciliation usage example

use bigdecimal::BigDecimal;
use withholding_recon::utils::MemorySessionStore;
use withholding_recon::{
    detect_column_mapping, discover_headers, export_partition, general_summary, ManualSelection,
    RawRecord, Reconciler, SaveMode, SelectionBucket,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🧾 Withholding Reconciliation - Basic Example\n");

    // 1. Rows as delivered by spreadsheet ingestion
    let tax_authority = vec![
        RawRecord::new()
            .with("CUIT Agente", "30-71234567-8")
            .with("Monto Retenido", "$ 1.250,00"),
        RawRecord::new()
            .with("CUIT Agente", "30-71234567-8")
            .with("Monto Retenido", "$ 310,40"),
        RawRecord::new()
            .with("CUIT Agente", "33-69876543-9")
            .with("Monto Retenido", "$ 98,10"),
    ];
    let accounting = vec![
        RawRecord::new()
            .with("Cuit", "30712345678")
            .with("Crédito", 1250.0),
        RawRecord::new()
            .with("Cuit", "30712345678")
            .with("Crédito", 300.0),
        RawRecord::new()
            .with("Cuit", "20111111112")
            .with("Crédito", 45.0),
    ];

    // 2. Pre-select columns from headers
    let mut reconciler = Reconciler::new(MemorySessionStore::new());
    let mapping = detect_column_mapping(
        &discover_headers(&tax_authority),
        &discover_headers(&accounting),
        &reconciler.config().column_hints,
    );
    println!("📋 Column mapping: {mapping:?}\n");

    // 3. Import and run the automatic pass
    let session = reconciler
        .import_session("March withholdings", mapping, tax_authority, accounting)
        .await?;
    let mut session = reconciler.process_session(session.id).await?;

    let summary = general_summary(&session);
    println!("🤖 After automatic matching:");
    println!(
        "  Total: {} ({} records)",
        summary.total_a, summary.record_count_a
    );
    println!(
        "  Reconciled: {} ({} records)",
        summary.reconciled_total, summary.reconciled_count
    );
    println!(
        "  Pending: {} ({} records)\n",
        summary.pending_total, summary.pending_count
    );

    // 4. Reconcile the 310.40 withholding against the 300.00 booking by hand
    let mut selection = ManualSelection::new();
    let mapping = session.mapping.clone();
    selection.add_to_selection(&session.source_a[1], SelectionBucket::PendingA, &mapping)?;
    selection.add_to_selection(&session.source_b[1], SelectionBucket::PendingB, &mapping)?;
    let totals = selection.totals().clone();
    println!(
        "✋ Selection: A = {}, B = {}, net = {}",
        totals.sum_a, totals.sum_b, totals.net
    );
    let group = selection.confirm_manual_match(&mut session)?;
    println!("  ✓ {} -> {}\n", group.match_id, group.status.label());

    // 5. Discrepancies per provider
    println!("📊 Provider discrepancies (threshold 10):");
    let report = reconciler.discrepancies(&session, &BigDecimal::from(10));
    for entry in &report.entries {
        println!(
            "  {}: A = {}, B = {}, difference = {}",
            entry.identifier, entry.total_a, entry.total_b, entry.difference
        );
    }
    println!(
        "  {} providers, {} total difference\n",
        report.providers_found, report.total_difference
    );

    // 6. Save and export
    let session = reconciler.save_session(&session, SaveMode::Update).await?;
    for sheet in export_partition(&session)? {
        println!("📁 Sheet '{}': {} records", sheet.name, sheet.records.len());
    }

    Ok(())
}
