// src/pretty.rs — column rendering of sequential histories
//
// One column per thread slot:
//
//   *--------------------*--------------------*
//   |         T0         |         T1         |
//   *--------------------*--------------------*
//   | [2] push(5)        |                    |
//   |                    | [3] pop()          |
//   |                    | <-- 5              |
//   | <-- void           |                    |
//   *--------------------*--------------------*

use std::fmt::Write;

use crate::history::Event;

const MIN_CELL_WIDTH: usize = 20;

pub struct PrettyPrinter {
    threads: usize,
}

impl PrettyPrinter {
    pub fn new(threads: usize) -> Self {
        PrettyPrinter { threads }
    }

    fn cell_text(event: &Event) -> String {
        match event {
            Event::Invoke(inv) => {
                let mut text = format!(" [{}] {}(", inv.task, inv.method);
                for (i, arg) in inv.args.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    let _ = write!(text, "{arg}");
                }
                text.push(')');
                text
            }
            Event::Response(res) => format!(" <-- {}", res.result),
        }
    }

    /// Renders the sequential history as a per-thread table.
    pub fn render(&self, history: &[Event]) -> String {
        let cells: Vec<(usize, String)> = history
            .iter()
            .map(|event| (event.thread(), Self::cell_text(event)))
            .collect();
        let width = cells
            .iter()
            .map(|(_, text)| text.len() + 1)
            .max()
            .unwrap_or(0)
            .max(MIN_CELL_WIDTH);

        let mut out = String::new();
        let separator = {
            let mut s = String::from("*");
            for _ in 0..self.threads {
                s.push_str(&"-".repeat(width));
                s.push('*');
            }
            s.push('\n');
            s
        };

        out.push_str(&separator);
        out.push('|');
        for i in 0..self.threads {
            let label = format!("T{i}");
            let rest = width - label.len();
            out.push_str(&" ".repeat(rest / 2));
            out.push_str(&label);
            out.push_str(&" ".repeat(rest - rest / 2));
            out.push('|');
        }
        out.push('\n');
        out.push_str(&separator);

        for (thread, text) in &cells {
            out.push('|');
            for column in 0..self.threads {
                if column == *thread {
                    out.push_str(text);
                    out.push_str(&" ".repeat(width - text.len()));
                } else {
                    out.push_str(&" ".repeat(width));
                }
                out.push('|');
            }
            out.push('\n');
        }

        out.push_str(&separator);
        out
    }
}
