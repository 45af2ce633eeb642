// Proctoring alert CLI
// Exercises a running server: health, dashboard, live teacher feed and simulated tab switches

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "proctor-cli")]
#[command(about = "Proctoring alert server CLI", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:5000)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Print the teacher dashboard snapshot
    Dashboard,

    /// Register as a teacher and print alerts as they arrive
    Teacher {
        /// Seconds to listen before exiting (0 = until Ctrl+C)
        #[arg(short, long, default_value_t = 0)]
        duration: u64,
    },

    /// Report one tab switch as a student client
    TabSwitch {
        /// Student identifier
        #[arg(long, default_value = "")]
        student: String,

        /// Exam identifier
        #[arg(long, default_value = "")]
        exam: String,
    },

    /// Create an exam and announce it to connected clients
    PublishExam {
        #[arg(short, long)]
        title: String,

        #[arg(long, default_value = "")]
        subject: String,

        /// Duration in minutes
        #[arg(short, long, default_value_t = 60)]
        duration: u32,
    },

    /// Run the teacher/student delivery scenario against the server
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ok = match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Dashboard => show_dashboard(&cli.server).await,
        Commands::Teacher { duration } => listen_as_teacher(&cli.server, *duration).await,
        Commands::TabSwitch { student, exam } => send_tab_switch(&cli.server, student, exam).await,
        Commands::PublishExam {
            title,
            subject,
            duration,
        } => publish_exam(&cli.server, title, subject, *duration).await,
        Commands::Validate => validate(&cli.server).await,
    };

    if !ok {
        std::process::exit(1);
    }
}

fn envelope(event: &str, data: serde_json::Value) -> Message {
    Message::Text(json!({ "event": event, "data": data }).to_string())
}

async fn check_health(server: &str) -> bool {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/api/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Health check passed", "✓".green());
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                println!("  Database: {}", body["database"].as_str().unwrap_or("unknown"));
                println!("  Timestamp: {}", body["timestamp"].as_str().unwrap_or("unknown"));
            }
            true
        }
        Ok(resp) => {
            println!("{} Health check failed: {}", "✗".red(), resp.status());
            false
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
            false
        }
    }
}

async fn show_dashboard(server: &str) -> bool {
    println!("{}", "Fetching teacher dashboard...".cyan());

    let url = format!("http://{}/api/teacher/dashboard", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await {
            Ok(body) => {
                let stats = &body["stats"];
                println!("\n{}", "═".repeat(50).green());
                println!("  {} {}", "Students:".bold(), stats["totalStudents"]);
                println!("  {} {}", "Active exams:".bold(), stats["activeExams"]);
                println!("  {} {}", "Alerts today:".bold(), stats["alertsToday"].to_string().yellow());
                println!("  {} {}", "Average score:".bold(), stats["avgScore"]);
                println!("{}", "═".repeat(50).green());

                if let Some(alerts) = body["alerts"].as_array() {
                    println!("\n{}", "Recent alerts".bold());
                    for alert in alerts {
                        println!(
                            "  {} {} {} ({}) at {}",
                            "⚠".yellow(),
                            alert["student"].as_str().unwrap_or("?").bold(),
                            alert["reason"].as_str().unwrap_or("?"),
                            alert["exam"].as_str().unwrap_or("?"),
                            alert["time"].as_str().unwrap_or("?"),
                        );
                    }
                }
                true
            }
            Err(e) => {
                println!("{} Malformed dashboard response: {}", "✗".red(), e);
                false
            }
        },
        Ok(resp) => {
            println!("{} Dashboard request failed: {}", "✗".red(), resp.status());
            false
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            false
        }
    }
}

async fn listen_as_teacher(server: &str, duration: u64) -> bool {
    let url = format!("ws://{}/ws", server);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect to WebSocket: {}", "✗".red(), e);
            return false;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    if write
        .send(envelope("register_role", json!({ "role": "TEACHER" })))
        .await
        .is_err()
    {
        println!("{} Failed to register as teacher", "✗".red());
        return false;
    }

    println!("{} Registered as teacher on {}", "✓".green(), url);
    if duration == 0 {
        println!("Listening for alerts. Press {} to exit.", "Ctrl+C".bold());
    } else {
        println!("Listening for alerts for {}s...", duration);
    }

    let deadline = (duration > 0).then(|| Instant::now() + Duration::from_secs(duration));
    loop {
        let wait = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(30),
        };
        if wait.is_zero() {
            break;
        }

        match timeout(wait, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => print_server_event(&text),
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                println!("{} Server closed the connection", "✗".yellow());
                break;
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                println!("{} Connection error: {}", "✗".red(), e);
                return false;
            }
            Err(_) if deadline.is_some() => break,
            Err(_) => continue,
        }
    }

    true
}

fn print_server_event(text: &str) {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(text) else {
        println!("{} {}", "◀".green(), text.bright_white());
        return;
    };

    match event["event"].as_str() {
        Some("teacher_alert") => {
            let data = &event["data"];
            println!(
                "{} {} {} switched tabs during {} at {}",
                "🚨".red(),
                data["type"].as_str().unwrap_or("?").red().bold(),
                data["student"].as_str().unwrap_or("?").bold(),
                data["examId"].as_str().unwrap_or("?"),
                data["timestamp"].as_str().unwrap_or("?"),
            );
        }
        Some("new_exam") => {
            println!(
                "{} New exam published: {}",
                "📝".cyan(),
                event["data"]["title"].as_str().unwrap_or("?").bold()
            );
        }
        _ => println!("{} {}", "◀".green(), text.bright_white()),
    }
}

async fn send_tab_switch(server: &str, student: &str, exam: &str) -> bool {
    let url = format!("ws://{}/ws", server);
    let (mut ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect to WebSocket: {}", "✗".red(), e);
            return false;
        }
    };

    let sent = async {
        ws_stream
            .send(envelope("register_role", json!({ "role": "STUDENT" })))
            .await?;
        ws_stream
            .send(envelope("exam_tab_switch", json!({ "student": student, "examId": exam })))
            .await
    }
    .await;

    match sent {
        Ok(()) => {
            println!("{} Tab switch reported for {} / {}", "✓".green(), student, exam);
            // Give the server a moment to read the frame before closing
            sleep(Duration::from_millis(200)).await;
            let _ = ws_stream.close(None).await;
            true
        }
        Err(e) => {
            println!("{} Failed to send tab switch: {}", "✗".red(), e);
            false
        }
    }
}

async fn publish_exam(server: &str, title: &str, subject: &str, duration: u32) -> bool {
    let url = format!("http://{}/api/exams", server);
    let body = json!({
        "title": title,
        "subject": subject,
        "durationMinutes": duration,
    });

    match reqwest::Client::new().post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            let exam: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "{} Exam published: {} ({})",
                "✓".green(),
                exam["title"].as_str().unwrap_or(title).bold(),
                exam["id"].as_str().unwrap_or("?")
            );
            true
        }
        Ok(resp) => {
            println!("{} Publishing failed: {}", "✗".red(), resp.status());
            false
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            false
        }
    }
}

/// Teacher A and student B connect; B reports a tab switch; only A hears about it
async fn validate(server: &str) -> bool {
    println!("{}", "Running delivery scenario...".cyan());
    let url = format!("ws://{}/ws", server);

    let (teacher, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect teacher: {}", "✗".red(), e);
            return false;
        }
    };
    let (student, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect student: {}", "✗".red(), e);
            return false;
        }
    };
    let (mut teacher_write, mut teacher_read) = teacher.split();
    let (mut student_write, mut student_read) = student.split();

    let student_name = format!("validate-{}", std::process::id());
    let setup = async {
        teacher_write
            .send(envelope("register_role", json!({ "role": "TEACHER" })))
            .await?;
        student_write
            .send(envelope("register_role", json!({ "role": "STUDENT" })))
            .await?;
        // Registration frames carry no reply; give the server time to apply them
        sleep(Duration::from_millis(200)).await;
        student_write
            .send(envelope(
                "exam_tab_switch",
                json!({ "student": student_name, "examId": "exam-1" }),
            ))
            .await
    };
    if let Err(e) = setup.await {
        println!("{} Failed to send scenario messages: {}", "✗".red(), e);
        return false;
    }

    let mut passed = true;
    match timeout(Duration::from_secs(3), teacher_read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            let event: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
            if event["event"] == "teacher_alert" && event["data"]["student"] == student_name.as_str() {
                println!("{} Teacher received teacher_alert", "✓".green());
            } else {
                println!("{} Unexpected teacher message: {}", "✗".red(), text);
                passed = false;
            }
        }
        _ => {
            println!("{} Teacher did not receive an alert", "✗".red());
            passed = false;
        }
    }

    match timeout(Duration::from_millis(500), student_read.next()).await {
        Err(_) => println!("{} Student received nothing", "✓".green()),
        Ok(msg) => {
            println!("{} Student unexpectedly received: {:?}", "✗".red(), msg);
            passed = false;
        }
    }

    if passed {
        println!("\n{}", "Scenario passed".green().bold());
    } else {
        println!("\n{}", "Scenario failed".red().bold());
    }
    passed
}
