use hscheck_core::geometry::Fragment;
use hscheck_core::model::{AuditReport, InvoiceBlock};
use hscheck_core::rules::schema::SelectedField;

pub fn print_report(report: &AuditReport) {
    if let Some(ref source) = report.source {
        println!("=== {source} ===\n");
    }

    if report.is_empty() {
        println!("  No invoice items could be reconstructed.\n");
    }

    for (i, block) in report.blocks.iter().enumerate() {
        print_block(i + 1, block);
    }

    println!(
        "  Document totals: quantity '{}', amount '{}'\n",
        report.totals.quantity, report.totals.amount
    );

    if !report.warnings.is_empty() {
        println!("  Warnings:");
        for w in &report.warnings {
            println!("    - {}", w.message);
        }
        println!();
    }

    if report.discrepancies.is_empty() {
        if !report.is_empty() {
            println!("  No discrepancies found.");
        }
    } else {
        println!("  Discrepancies ({}):", report.discrepancies.len());
        for d in &report.discrepancies {
            println!("    [{}] {}", d.kind, d.message);
        }
    }
}

fn print_block(number: usize, block: &InvoiceBlock) {
    let code = if block.hs_code.is_empty() {
        "no HS code"
    } else {
        block.hs_code.as_str()
    };
    println!("  Block {number}: {} ({code})", block.description);

    if !block.items.is_empty() {
        let code_width = block
            .items
            .iter()
            .map(|it| it.reference_code.len())
            .max()
            .unwrap_or(8)
            .max(8);
        let customer_width = block
            .items
            .iter()
            .map(|it| it.final_customer.chars().count())
            .max()
            .unwrap_or(8)
            .max(8);

        println!(
            "    {:<cw$}  {:<uw$}  {:>12}  {:>10}  {:>12}",
            "Item",
            "Customer",
            "Quantity",
            "Unit",
            "Amount",
            cw = code_width,
            uw = customer_width
        );
        println!("    {}", "-".repeat(code_width + customer_width + 44));
        for item in &block.items {
            println!(
                "    {:<cw$}  {:<uw$}  {:>12}  {:>10}  {:>12}",
                item.reference_code,
                item.final_customer,
                item.quantity,
                item.unit_price,
                item.amount,
                cw = code_width,
                uw = customer_width
            );
        }
    }

    println!(
        "    Subtotal: {}   Total: {}\n",
        display_or_dash(&block.subtotal),
        display_or_dash(&block.total_amount)
    );
}

fn display_or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

pub fn print_selected(fields: &[SelectedField]) {
    let width = fields.iter().map(|f| f.name.len()).max().unwrap_or(10);
    for field in fields {
        match field.value {
            Some(ref value) => println!("  {:<width$}  {}", field.name, value),
            None => println!("  {:<width$}  (no match)", field.name),
        }
    }
}

pub fn print_lines(lines: &[Fragment]) {
    for line in lines {
        println!(
            "  p{:<3} {:>4}  [{:>7.1} {:>7.1} {:>7.1} {:>7.1}]  {}",
            line.page_number,
            line.index,
            line.bbox.x_min,
            line.bbox.y_min,
            line.bbox.x_max,
            line.bbox.y_max,
            line.text
        );
    }
    println!("\n  {} line(s)", lines.len());
}
