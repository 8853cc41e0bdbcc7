use crate::records::StudentRecord;
use serde::Serialize;

pub const DEFAULT_AGE_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBin {
    /// Inclusive lower edge.
    pub start: f64,
    /// Exclusive upper edge, except for the last bin which includes it.
    pub end: f64,
    pub count: usize,
}

/// Chart-ready numbers for the admin dashboard. Rendering is the front end's
/// business.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    pub by_grade: Vec<ValueCount>,
    pub by_gender: Vec<ValueCount>,
    pub by_section: Vec<ValueCount>,
    pub age_histogram: Vec<AgeBin>,
}

/// Counts per distinct value, most frequent first; ties keep the order in
/// which values first appear. Blank values are not counted.
pub fn value_counts<'a, I>(values: I) -> Vec<ValueCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<ValueCount> = Vec::new();
    for v in values {
        let v = v.trim();
        if v.is_empty() {
            continue;
        }
        match out.iter_mut().find(|c| c.value == v) {
            Some(c) => c.count += 1,
            None => out.push(ValueCount {
                value: v.to_string(),
                count: 1,
            }),
        }
    }
    // stable, so ties stay in first-seen order
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Equal-width bins spanning the youngest to the oldest age.
pub fn age_histogram(ages: &[u32], bins: usize) -> Vec<AgeBin> {
    let (Some(&min), Some(&max)) = (ages.iter().min(), ages.iter().max()) else {
        return Vec::new();
    };
    let bins = bins.max(1);
    let (min, max) = (f64::from(min), f64::from(max));

    if max == min {
        return vec![AgeBin {
            start: min,
            end: min + 1.0,
            count: ages.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<AgeBin> = (0..bins)
        .map(|i| AgeBin {
            start: min + width * i as f64,
            end: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for &age in ages {
        let i = (((f64::from(age) - min) / width).floor() as usize).min(bins - 1);
        out[i].count += 1;
    }
    out
}

pub fn summarize(records: &[StudentRecord], bins: usize) -> DashboardSummary {
    let ages: Vec<u32> = records.iter().map(|r| r.age).collect();
    DashboardSummary {
        total: records.len(),
        by_grade: value_counts(records.iter().map(|r| r.grade.as_str())),
        by_gender: value_counts(records.iter().map(|r| r.gender.as_str())),
        by_section: value_counts(records.iter().map(|r| r.section.as_str())),
        age_histogram: age_histogram(&ages, bins),
    }
}
