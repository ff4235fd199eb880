//! QTL tables and p-value formatting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Format a p-value in scientific notation with a two-digit exponent
/// (`1.23e-05`). Values below double precision print as `<2.22e-16`.
pub fn format_pvalue(p: f64) -> String {
    if p.is_nan() {
        return "NA".to_string();
    }
    if p < f64::EPSILON {
        return format!("<{}", scientific(f64::EPSILON));
    }
    scientific(p)
}

fn scientific(x: f64) -> String {
    let s = format!("{:.2e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

/// One accepted QTL (or a support-interval bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QtlRecord {
    /// Linkage group name.
    pub lg: String,
    pub position_cm: f64,
    /// Global position index.
    pub marker: usize,
    pub statistic: f64,
    pub pvalue: f64,
}

/// QTL rows in acceptance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QtlTable {
    pub records: Vec<QtlRecord>,
}

impl QtlTable {
    pub fn new(records: Vec<QtlRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QtlRecord> {
        self.records.iter()
    }

    pub fn markers(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.marker).collect()
    }

    /// Copy of the table in genome order.
    pub fn sorted_by_genome(&self) -> QtlTable {
        let mut records = self.records.clone();
        records.sort_by_key(|r| r.marker);
        QtlTable { records }
    }
}

impl fmt::Display for QtlTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LG\tPos\tMrk\tScore\tPval")?;
        for r in &self.records {
            writeln!(
                f,
                "{}\t{:.2}\t{}\t{:.4}\t{}",
                r.lg,
                r.position_cm,
                r.marker,
                r.statistic,
                format_pvalue(r.pvalue)
            )?;
        }
        Ok(())
    }
}
