use serde::{Deserialize, Serialize};

/// Which side of the comparison a point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Query,
    Candidate,
}

/// One row of the projected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f32,
    pub y: f32,
    pub category: Category,
    pub similarity: Option<f64>,
    pub label: String,
}

/// Projected points, query first, then candidates in input order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectionTable {
    pub rows: Vec<ProjectedPoint>,
}

impl ProjectionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn query(&self) -> Option<&ProjectedPoint> {
        self.rows.first().filter(|r| r.category == Category::Query)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &ProjectedPoint> {
        self.rows.iter().filter(|r| r.category == Category::Candidate)
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &ProjectedPoint> {
        self.rows.iter().filter(move |r| r.category == category)
    }
}
