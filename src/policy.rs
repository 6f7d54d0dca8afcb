use crate::{
    course::Course,
    error::{Error, Result},
    student::{Identity, Role},
};

/// Allow the caller only if their role is one of `roles`.
pub fn authorize(identity: &Identity, roles: &[Role]) -> Result<()> {
    if roles.contains(&identity.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "role {} is not permitted",
            identity.role.as_str()
        )))
    }
}

/// Only the course's own instructor may author its content.
pub fn ensure_instructor_of(identity: &Identity, course: &Course) -> Result<()> {
    authorize(identity, &[Role::Instructor])?;
    if course.instructor_id != identity.id {
        return Err(Error::Forbidden(format!(
            "not the instructor of course {}",
            course.id
        )));
    }
    Ok(())
}

pub fn ensure_enrolled(identity: &Identity, course: &Course) -> Result<()> {
    if !course.is_enrolled(identity.id) {
        return Err(Error::Forbidden(format!(
            "not enrolled in course {}",
            course.id
        )));
    }
    Ok(())
}
