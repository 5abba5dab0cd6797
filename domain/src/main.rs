use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryStore;
use domain::service::UserService;
use domain::validate::validate_user_input;
use domain::{Outcome, UserInput, UserStore};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain create <full-name> <email> <phone> <address>\n  domain list [filter]\n\nNotes:\n  - This demo CLI uses an in-memory store seeded with one sample user; data is not persisted across runs.",
        domain::about()
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let store = InMemoryStore::new();
    let mut svc = UserService::new(store.open());
    svc.create(UserInput::new(
        "Test User",
        "test@example.com",
        "+10000000000",
        "Sample address",
    ))
    .map_err(|e| format!("seed failed: {}", e))?;

    match cmd.as_str() {
        "create" => {
            let rest: Vec<String> = args.collect();
            let [full_name, email, phone, address] = rest.as_slice() else {
                return Err("create expects <full-name> <email> <phone> <address>".into());
            };
            let input = UserInput::new(full_name, email, phone, address);
            if let Err(errs) = validate_user_input(&input) {
                return Err(errs.to_string());
            }
            match svc.create(input) {
                Ok(Outcome::Done(user)) => {
                    println!("created: {} {} <{}>", user.id, user.full_name, user.email);
                    Ok(())
                }
                Ok(Outcome::Declined(reason)) => Err(format!("declined: {}", reason)),
                Err(e) => Err(format!("create failed: {}", e)),
            }
        }
        "list" => {
            let filter = args.next();
            let users = svc
                .list(filter.as_deref())
                .map_err(|e| format!("list failed: {}", e))?;
            for user in users {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    user.id, user.full_name, user.email, user.phone, user.address
                );
            }
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
