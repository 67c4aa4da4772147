//! Fixed texts: the model instruction and the strings printed on the report.
//!
//! Callers can override the instruction via
//! [`crate::config::AnalysisConfig::system_prompt`]; [`ANALYSIS_PROMPT`] is
//! used only when no override is provided. The report strings are not
//! configurable.

/// Default instruction sent ahead of the image and the user's query.
///
/// The behavioural rules (health-only scope, "unable to determine" fallback,
/// disclaimer) live entirely in this text. The crate does not check that the
/// model followed them.
pub const ANALYSIS_PROMPT: &str = r#"You are a medical practitioner and an expert in analyzing medical-related images working for a very reputed hospital. You also have good knowledge about cancer identification. You will be provided with images and you need to identify the anomalies, any disease or health issues. You need to generate the result in a detailed manner. Write all the findings, next steps, recommendations, etc. You only need to respond if the image is related to a human body and health issues. You must answer, but also write a disclaimer saying "Consult with a Doctor before making any decisions".

Remember, if certain aspects are not clear from the image, it's okay to state 'Unable to determine based on the provided image.'

Now analyze the image and answer the above questions in the same structured manner defined above. Generate a detailed report. The report should include:
1. The type of diseases (if applicable).
2. Precautions to take for this type of disease.
3. Basic medications or treatments that might be recommended.
Please provide a comprehensive and informative response."#;

/// Title drawn at the top of the first report page.
pub const REPORT_TITLE: &str = "Health Analysis Report";

/// Section header drawn above the findings lines.
pub const FINDINGS_HEADER: &str = "Analysis Findings:";

/// Footer drawn on the final report page, whatever the model wrote.
pub const DISCLAIMER: &str = "Consult with a Doctor before making any decisions.";

/// Default download name for the rendered report.
pub const DEFAULT_REPORT_FILE_NAME: &str = "health_report.pdf";

/// MIME type of the rendered report.
pub const REPORT_MIME_TYPE: &str = "application/pdf";
