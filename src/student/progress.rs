use crate::course::Course;

use super::Student;

impl Student {
    /// Record a finished lesson. Returns false if it was already recorded.
    pub fn mark_lesson_complete(&mut self, lesson_id: i64) -> bool {
        self.completed_lessons.insert(lesson_id)
    }

    /// Lessons of `course` this student has finished, in course order.
    pub fn completed_in<'a>(&'a self, course: &'a Course) -> impl Iterator<Item = i64> + 'a {
        course
            .lesson_ids
            .iter()
            .copied()
            .filter(|id| self.completed_lessons.contains(id))
    }
}

/// True iff every lesson of the course has been completed.
///
/// A course without lessons is vacuously complete; callers deciding on
/// certification must check for that case themselves.
pub fn is_course_complete(student: &Student, course: &Course) -> bool {
    course
        .lesson_ids
        .iter()
        .all(|id| student.completed_lessons.contains(id))
}
