//! Per-course overview derived from assignments and scores
//!
//! The server has no course listing for students; courses are the distinct
//! `courseId`s seen across the assignment and score listings, in the order
//! they first appear.

use std::collections::HashMap;

use api_client::ApiClient;
use serde::Serialize;

use crate::Result;
use crate::assignments::{self, AssignmentSummary};
use crate::scores::{self, ScoreItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub name: String,
    pub assignment_count: usize,
    pub graded_count: usize,
}

/// Fetch assignments and scores together and fold them into courses.
pub async fn list_courses(client: &ApiClient) -> Result<Vec<CourseSummary>> {
    let (assignment_items, score_items) =
        tokio::try_join!(assignments::list_all(client), scores::list_mine(client))?;
    Ok(aggregate(&assignment_items, &score_items))
}

/// Count assignments and graded scores per course. Rows without a course
/// id are skipped; a course without a name is named by its id.
pub fn aggregate(
    assignment_items: &[AssignmentSummary],
    score_items: &[ScoreItem],
) -> Vec<CourseSummary> {
    let mut courses = CourseTable::default();
    for item in assignment_items {
        let course = courses.entry(item.course_id.as_deref(), item.course_name.as_deref());
        if let Some(course) = course {
            course.assignment_count += 1;
        }
    }
    for item in score_items {
        if let Some(course) = courses.entry(item.course_id.as_deref(), item.course_name.as_deref())
            && item.is_graded()
        {
            course.graded_count += 1;
        }
    }
    courses.rows
}

/// Courses in first-seen order with an id lookup.
#[derive(Default)]
struct CourseTable {
    rows: Vec<CourseSummary>,
    index: HashMap<String, usize>,
}

impl CourseTable {
    fn entry(&mut self, id: Option<&str>, name: Option<&str>) -> Option<&mut CourseSummary> {
        let id = id.filter(|id| !id.is_empty())?;
        let slot = match self.index.get(id) {
            Some(slot) => *slot,
            None => {
                self.rows.push(CourseSummary {
                    id: id.to_string(),
                    name: name.filter(|n| !n.is_empty()).unwrap_or(id).to_string(),
                    assignment_count: 0,
                    graded_count: 0,
                });
                self.index.insert(id.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        self.rows.get_mut(slot)
    }
}
