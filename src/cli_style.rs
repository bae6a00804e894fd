use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    let heading = Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
    let good = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Green)));
    let bad = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Red)));

    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(good)
        .valid(good)
        .invalid(bad)
        .error(bad)
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const TEAL: Color = Color::Rgb {
        r: 64,
        g: 224,
        b: 208,
    };
    pub const AMBER: Color = Color::Rgb {
        r: 255,
        g: 191,
        b: 0,
    };
    pub const VIOLET: Color = Color::Rgb {
        r: 160,
        g: 120,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 230,
        b: 118,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 240,
        g: 240,
        b: 240,
    };
}

mod box_chars {
    pub const TOP_LEFT: &str = "╭";
    pub const TOP_RIGHT: &str = "╮";
    pub const BOTTOM_LEFT: &str = "╰";
    pub const BOTTOM_RIGHT: &str = "╯";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";

    pub const NOTE: &str = "♪";
    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Lines
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        box_chars::CROSS_MARK.with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::AMBER).bold(),
        message.with(colors::AMBER)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════════════════════════

const SECTION_WIDTH: usize = 60;

pub fn print_section_header(title: &str) {
    let title_len = title.width();
    let left = SECTION_WIDTH.saturating_sub(title_len + 2) / 2;
    let right = SECTION_WIDTH.saturating_sub(title_len + 2 + left);

    println!();
    println!(
        "{}{} {} {}{}",
        box_chars::TOP_LEFT.with(colors::TEAL),
        box_chars::HORIZONTAL.repeat(left).with(colors::TEAL),
        title.with(colors::TEAL).bold().attribute(Attribute::Italic),
        box_chars::HORIZONTAL.repeat(right).with(colors::TEAL),
        box_chars::TOP_RIGHT.with(colors::TEAL)
    );
}

pub fn print_section_footer() {
    println!(
        "{}{}{}",
        box_chars::BOTTOM_LEFT.with(colors::TEAL),
        box_chars::HORIZONTAL.repeat(SECTION_WIDTH).with(colors::TEAL),
        box_chars::BOTTOM_RIGHT.with(colors::TEAL)
    );
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::VIOLET),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: &[&str]) -> Self {
        TableBuilder {
            col_widths: headers.iter().map(|h| h.width()).collect(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, cell) in self.col_widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    fn print_border(&self, left: &str, junction: &str, right: &str) {
        let segments: Vec<String> = self
            .col_widths
            .iter()
            .map(|width| box_chars::HORIZONTAL.repeat(width + 2))
            .collect();
        println!(
            "{}",
            format!("{}{}{}", left, segments.join(junction), right).with(colors::TEAL)
        );
    }

    fn print_cells(&self, cells: &[String], color: CtColor, bold: bool) {
        print!("{}", box_chars::VERTICAL.with(colors::TEAL));
        for (i, cell) in cells.iter().enumerate() {
            let width = self.col_widths.get(i).copied().unwrap_or(0);
            let padding = " ".repeat(width.saturating_sub(cell.width()));
            let styled = cell.clone().with(color);
            if bold {
                print!(" {}{} ", styled.bold(), padding);
            } else {
                print!(" {}{} ", styled, padding);
            }
            print!("{}", box_chars::VERTICAL.with(colors::TEAL));
        }
        println!();
    }

    pub fn print(&self) {
        self.print_border(box_chars::TOP_LEFT, box_chars::T_TOP, box_chars::TOP_RIGHT);
        self.print_cells(&self.headers, colors::TEAL, true);
        self.print_border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);
        for row in &self.rows {
            self.print_cells(row, colors::WHITE, false);
        }
        self.print_border(
            box_chars::BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::BOTTOM_RIGHT,
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prompt and Session
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_prompt() -> String {
    format!(
        "{}{} ",
        box_chars::NOTE.with(colors::TEAL).bold(),
        "❯".with(colors::VIOLET).bold(),
    )
}

pub fn print_command_echo(command: &str) {
    println!(
        "{}{}  {}",
        box_chars::NOTE.with(colors::TEAL).bold(),
        "❯".with(colors::VIOLET).bold(),
        command.with(colors::GREEN).bold()
    );
}

pub fn print_welcome(db_path: &str, schema_version: usize) {
    print_section_header("MUSIC LIBRARY");
    print_key_value("Database", db_path);
    print_key_value("Schema version", &schema_version.to_string());
    print_key_value("Version", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  {}", "Type 'help' for available commands".with(colors::DIM));
    print_section_footer();
}

pub fn print_goodbye() {
    println!();
    println!(
        "  {} {}",
        box_chars::NOTE.with(colors::TEAL),
        "Goodbye!".with(colors::VIOLET).bold()
    );
    println!();
}
