use chrono::{Days, NaiveDate};

/// Archive-eligibility decision for one record.
///
/// Absent activity evidence keeps the record: deleting on ambiguity is
/// worse than keeping a dead product one cycle longer. The inequality is
/// strict, so a record updated exactly at the retention boundary is
/// retained.
pub fn is_eligible_for_archive(
    last_activity: Option<NaiveDate>,
    reference: NaiveDate,
    retention_days: u32,
) -> bool {
    let Some(last) = last_activity else {
        return false;
    };
    match reference.checked_sub_days(Days::new(u64::from(retention_days))) {
        Some(threshold) => last < threshold,
        None => false,
    }
}
