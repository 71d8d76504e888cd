use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::config::Config;
use crate::error::{BoardError, Result};
use crate::model::PeerAddress;
use crate::node::Node;
use crate::output::{self, Format};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a node and drive it from an interactive menu on stdin.
pub fn run(config: Config, format: Format) -> Result<()> {
    let node = Node::start(config)?;
    eprintln!("Your port number is {}", node.current_server_port());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let result = menu(&node, stdin.lock(), &mut stdout, format);
    let stopped = node.stop(STOP_TIMEOUT);
    result?;
    stopped
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> Result<Option<String>> {
    write!(out, "{label}")?;
    out.flush()?;
    read_line(input)
}

/// Menu loop. Returns on the exit option or end of input.
pub fn menu<R: BufRead, W: Write>(node: &Node, mut input: R, out: &mut W, format: Format) -> Result<()> {
    loop {
        writeln!(out)?;
        writeln!(out, "====== Message Board ======")?;
        writeln!(out, "1. Get messages from peer")?;
        writeln!(out, "2. Add a message")?;
        writeln!(out, "3. Print all messages")?;
        writeln!(out, "4. Print known peers")?;
        writeln!(out, "5. Exit")?;
        writeln!(out, "===========================")?;

        let Some(choice) = prompt(&mut input, out, "Enter option number: ")? else {
            return Ok(());
        };

        match choice.trim() {
            "1" => {
                let Some(raw) = prompt(&mut input, out, "Enter port of peer: ")? else {
                    return Ok(());
                };
                let Ok(port) = raw.trim().parse::<u16>() else {
                    writeln!(out, "'{}' is not a valid port", raw.trim())?;
                    continue;
                };
                match node.pull_one(PeerAddress::new(port)) {
                    Ok(report) => writeln!(
                        out,
                        "Pulled from {port}: {} new messages, {} new peers",
                        report.new_messages, report.new_peers
                    )?,
                    Err(BoardError::PeerUnreachable { .. }) => {
                        writeln!(out, "{port} is not available for connection")?
                    }
                    Err(e) => writeln!(out, "Could not pull from {port}: {e}")?,
                }
            }
            "2" => {
                let Some(text) = prompt(&mut input, out, "Enter message: ")? else {
                    return Ok(());
                };
                match node.author_message(&text) {
                    Ok(id) => writeln!(out, "Added message {id}")?,
                    Err(e) => writeln!(out, "Message added but not saved: {e}")?,
                }
            }
            "3" => writeln!(out, "{}", output::render_messages(&node.list_messages(), format)?)?,
            "4" => writeln!(out, "{}", output::render_peers(&node.peers(), format)?)?,
            "5" => return Ok(()),
            other => writeln!(out, "Unknown option '{other}'")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn quiet_config(dir: &std::path::Path) -> Config {
        let mut config = Config::new("ada", dir.join("board.json"));
        config.sweep_interval_ms = 3_600_000;
        config
    }

    #[test]
    fn menu_adds_and_prints_messages() {
        let dir = tempdir().unwrap();
        let node = Node::start(quiet_config(dir.path())).unwrap();

        let input = Cursor::new("2\nhello board\n3\n9\n5\n");
        let mut out = Vec::new();
        menu(&node, input, &mut out, Format::Json).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Added message"));
        assert!(out.contains("\"messages\":\"hello board\""));
        assert!(out.contains("Unknown option '9'"));
        assert_eq!(node.list_messages().len(), 1);
        node.stop(STOP_TIMEOUT).unwrap();
    }

    #[test]
    fn menu_reports_bad_and_unreachable_ports() {
        let dir = tempdir().unwrap();
        let node = Node::start(quiet_config(dir.path())).unwrap();
        let dead = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let input = Cursor::new(format!("1\nabc\n1\n{dead}\n"));
        let mut out = Vec::new();
        menu(&node, input, &mut out, Format::Pretty).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("'abc' is not a valid port"));
        assert!(out.contains(&format!("{dead} is not available for connection")));
        node.stop(STOP_TIMEOUT).unwrap();
    }
}
