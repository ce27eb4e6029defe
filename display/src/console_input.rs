use std::io::stdin;
use std::thread;

use tokio::sync::mpsc::{self, Receiver, Sender};

/// Reads key presses from stdin on its own thread. Every character of a
/// line is one key; the channel closes when stdin does.
pub fn console_input_thread() -> Receiver<i32> {
    let (sender, receiver) = mpsc::channel(100);
    thread::spawn(move || console_input_loop(sender));
    receiver
}

fn console_input_loop(sender: Sender<i32>) {
    loop {
        let mut input = String::new();
        match stdin().read_line(&mut input) {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                println!("error while reading console input: {e}");
                return;
            }
        }
        for key in keys_in_line(&input) {
            if sender.blocking_send(key).is_err() {
                return;
            }
        }
    }
}

fn keys_in_line(line: &str) -> Vec<i32> {
    line.trim().chars().filter(|c| !c.is_whitespace()).map(|c| c as i32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_visible_character_is_a_key() {
        assert_eq!(keys_in_line("w e\n"), vec!['w' as i32, 'e' as i32]);
        assert!(keys_in_line("  \n").is_empty());
    }
}
