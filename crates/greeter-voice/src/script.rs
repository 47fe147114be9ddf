//! Fixed lines spoken by the conversation.

use crate::intent::Intent;

pub const WELCOME: &str = "Welcome to S 2 P edutech, your gateway to tech success!";
pub const ASK_NAME: &str = "May I know your name?";
pub const NO_NAME: &str = "No problem, we can continue without a name.";
pub const MENU_PROMPT: &str = "What would you like to know?";
pub const MENU_OPTIONS: &str = "You can say: Courses, Internships, Certification, Trainers, or Exit.";
pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that. Please try again.";
pub const GOODBYE: &str = "Thank you for visiting S2Pedutech. Goodbye!";

pub const APOLOGY_NO_SPEECH: &str = "I didn't hear anything.";
pub const APOLOGY_UNINTELLIGIBLE: &str = "Sorry, I couldn't understand what you said.";
pub const APOLOGY_SERVICE: &str =
    "I'm having trouble connecting to the speech service. Please check the recognizer setup.";
pub const APOLOGY_UNEXPECTED: &str = "An unexpected error occurred during listening.";

const COURSES: &[&str] = &[
    "Here are the available courses at S 2 P edutech.",
    "MERN Full Stack Development. Duration: 3 Months. Technologies include MongoDB, Express.js, React.js, and Node.js. Fee: 25,000.",
    "MEAN Full Stack Development. Duration: 3 Months. Technologies include MongoDB, Express.js, Angular, and Node.js. Fee: 24,000.",
    "Java Full Stack Development. Duration: 4 Months. Covers Java, Spring Boot, Hibernate, HTML, CSS, and JavaScript. Fee: 30,000.",
    "Data Analyst Course. Duration: 3.5 Months. Includes Python, Pandas, NumPy, Matplotlib, and SQL. Fee: 28,000.",
];
const INTERNSHIP: &[&str] = &["We offer internships after course completion based on performance."];
const CERTIFICATION: &[&str] =
    &["You will receive a certificate after successfully completing your course."];
const TRAINERS: &[&str] = &["Our trainers are industry experts with over five years of experience."];
const EXIT: &[&str] = &[GOODBYE];

/// Lines spoken in reply to `intent`, in order.
pub fn response(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Courses => COURSES,
        Intent::Internship => INTERNSHIP,
        Intent::Certification => CERTIFICATION,
        Intent::Trainers => TRAINERS,
        Intent::Exit => EXIT,
    }
}

/// "Nice to meet you, Name!" with the first letter upper-cased.
pub fn greet_by_name(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    format!("Nice to meet you, {capitalized}!")
}
