use casedesk_models::RepairReport;

/// Renders a permission-name repair report for the terminal.
pub fn format_repair_report(report: &RepairReport) -> String {
    let mut out = format!(
        "Checked {} permission(s): {} repaired, {} conflict(s)\n",
        report.checked,
        report.repaired.len(),
        report.conflicts.len()
    );

    for renamed in &report.repaired {
        out.push_str(&format!(
            "  repaired  {} -> {}\n",
            renamed.old_name, renamed.new_name
        ));
    }
    for conflict in &report.conflicts {
        out.push_str(&format!(
            "  conflict  {} -> {} (name already taken)\n",
            conflict.old_name, conflict.new_name
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use casedesk_models::{PermissionId, RenamedPermission};

    #[test]
    fn test_empty_report() {
        let report = RepairReport {
            checked: 12,
            ..Default::default()
        };
        assert_eq!(
            format_repair_report(&report),
            "Checked 12 permission(s): 0 repaired, 0 conflict(s)\n"
        );
    }

    #[test]
    fn test_report_lists_renames_and_conflicts() {
        let report = RepairReport {
            checked: 3,
            repaired: vec![RenamedPermission {
                id: PermissionId::new(),
                old_name: "casos.leer.own".into(),
                new_name: "casos.read.own".into(),
            }],
            conflicts: vec![RenamedPermission {
                id: PermissionId::new(),
                old_name: "casos_read".into(),
                new_name: "casos.read.all".into(),
            }],
        };
        let text = format_repair_report(&report);
        assert!(text.starts_with("Checked 3 permission(s): 1 repaired, 1 conflict(s)"));
        assert!(text.contains("repaired  casos.leer.own -> casos.read.own"));
        assert!(text.contains("conflict  casos_read -> casos.read.all (name already taken)"));
    }
}
