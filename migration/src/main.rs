use std::{env, fs, path::Path};
use util::config;

mod runner;

/// `migration [clean|fresh]`: with no argument, applies every migration to
/// `DATABASE_PATH`. `clean` deletes the database file; `fresh` deletes it and
/// migrates from scratch. Both only touch files, not DSNs.
#[tokio::main]
async fn main() {
    let db_file = config::database_file();
    let url = config::database_url();
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(db_file.as_deref());
        }
        Some("fresh") => {
            remove_db_file(db_file.as_deref());
            create_db_dir(db_file.as_deref());
            runner::run_all_migrations(&url).await;
        }
        _ => {
            create_db_dir(db_file.as_deref());
            runner::run_all_migrations(&url).await;
        }
    }
}

fn remove_db_file(path: Option<&str>) {
    let Some(path) = path else {
        println!("DATABASE_PATH is a connection URL; nothing to delete");
        return;
    };
    let db_path = Path::new(path);
    if db_path.exists() {
        fs::remove_file(db_path).expect("Failed to delete DB file");
        println!("Deleted DB: {}", db_path.display());
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }
}

fn create_db_dir(path: Option<&str>) {
    if let Some(parent) = path.and_then(|p| Path::new(p).parent()) {
        fs::create_dir_all(parent).expect("Failed to create DB directory");
    }
}
