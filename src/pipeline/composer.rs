//! Reply body template.

use crate::config::ContactDetails;

/// Expands the fixed reply template with the operator's contact details.
///
/// The body never depends on the detected role; only the attachment does.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    contact: ContactDetails,
}

impl ReplyComposer {
    pub fn new(contact: ContactDetails) -> Self {
        Self { contact }
    }

    /// Reply body greeting `recruiter_name` about `job_title`.
    pub fn compose(&self, recruiter_name: &str, job_title: &str) -> String {
        let c = &self.contact;
        let mut body = String::with_capacity(512);

        body.push_str(&format!("Hi {},\n\n", recruiter_name.trim()));
        body.push_str(&format!(
            "Thank you for reaching out about {} and considering my profile.\n",
            job_title.trim()
        ));
        body.push_str(
            "Please find my resume attached, or let me know if you would like a copy tailored to this role.\n\n",
        );

        body.push_str("Contact Information:\n");
        if let Some(ref phone) = c.phone {
            body.push_str(&format!("* Phone: {phone}\n"));
        }
        body.push_str(&format!("* Email: {}\n", c.email));
        if let Some(ref url) = c.profile_url {
            body.push_str(&format!("* LinkedIn: {url}\n"));
        }
        body.push_str(&format!("* Expected Pay Rate: {}\n", c.rate));
        body.push_str(&format!("* Availability: {}\n\n", c.availability));

        body.push_str(
            "I am available for interviews at your convenience and can be reached during standard business hours.\n\n",
        );
        body.push_str(&format!("Best regards,\n{}", c.name));
        body
    }
}
