use crate::models::InterventionRequest;
use crate::views::humanize_feature;

/// Rendered intervention email, ready to hand to a [`crate::mailer::Mailer`].
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

const NO_NOTES: &str = "None provided";

/// Renders the fixed intervention template for `request`.
///
/// The top signal may be a raw backend feature name; it is shown with its
/// business-friendly label. All user-supplied values are HTML-escaped in the
/// HTML part.
pub fn render_intervention_email(request: &InterventionRequest) -> InterventionEmail {
    let signal = humanize_feature(&request.top_signal);
    let notes = request.officer_notes.as_deref().unwrap_or(NO_NOTES);

    let subject = format!(
        "Intervention Request: {} for {} ({})",
        request.selected_intervention, request.customer_name, request.customer_id
    );

    let text = format!(
        "Intervention Request\n\
         \n\
         A risk officer has requested an intervention for the following customer.\n\
         \n\
         Customer: {name}\n\
         Customer ID: {id}\n\
         Top Risk Signal: {signal}\n\
         Selected Intervention: {intervention}\n\
         Officer Notes: {notes}\n\
         \n\
         This request was raised from the Pre-Delinquency Early Warning dashboard.\n\
         Final intervention decisions remain with the assigned risk officer.\n\
         \n\
         Regards,\n\
         Risk Intelligence Team",
        name = request.customer_name,
        id = request.customer_id,
        signal = signal,
        intervention = request.selected_intervention,
        notes = notes,
    );

    let html = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; color: #333;">
    <h2 style="color: #ea580c;">Intervention Request</h2>
    <p>A risk officer has requested an intervention for the following customer.</p>
    <table style="border-collapse: collapse;">
      <tr><td style="padding: 4px 12px 4px 0;"><strong>Customer</strong></td><td>{name}</td></tr>
      <tr><td style="padding: 4px 12px 4px 0;"><strong>Customer ID</strong></td><td>{id}</td></tr>
      <tr><td style="padding: 4px 12px 4px 0;"><strong>Top Risk Signal</strong></td><td>{signal}</td></tr>
      <tr><td style="padding: 4px 12px 4px 0;"><strong>Selected Intervention</strong></td><td>{intervention}</td></tr>
      <tr><td style="padding: 4px 12px 4px 0;"><strong>Officer Notes</strong></td><td>{notes}</td></tr>
    </table>
    <hr style="margin: 20px 0;">
    <p style="font-size: 0.9em; color: #666;">
      This request was raised from the Pre-Delinquency Early Warning dashboard.
      Final intervention decisions remain with the assigned risk officer.
    </p>
  </body>
</html>"#,
        name = escape_html(&request.customer_name),
        id = escape_html(&request.customer_id),
        signal = escape_html(&signal),
        intervention = escape_html(&request.selected_intervention),
        notes = escape_html(notes).replace('\n', "<br>"),
    );

    InterventionEmail {
        subject,
        text,
        html,
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
