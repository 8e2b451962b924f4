/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! CLI utilities for terminal output formatting and colors.

use crossterm::tty::IsTty;
use std::fmt::Write;
use std::io::stdout;

use crate::project::{ProjectSummary, RecentProject};
use crate::workspace::{FileTreeNode, NodeType};

/// Configuration for color output
#[derive(Debug, Clone)]
pub struct ColorConfig {
    /// Whether escape codes are emitted.
    pub enabled: bool,
}

impl ColorConfig {
    /// Create a new `ColorConfig`, auto-detecting TTY unless nocolor is true
    #[must_use]
    pub fn new(nocolor: bool) -> Self {
        Self {
            enabled: !nocolor && stdout().is_tty(),
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    /// Blue (directories)
    #[must_use]
    pub fn blue(&self, s: &str) -> String {
        self.paint("34", s)
    }

    /// Red (errors)
    #[must_use]
    pub fn red(&self, s: &str) -> String {
        self.paint("31", s)
    }

    /// Cyan (project names)
    #[must_use]
    pub fn cyan(&self, s: &str) -> String {
        self.paint("36", s)
    }

    /// Dim text
    #[must_use]
    pub fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }
}

/// Get the terminal width, defaulting to 80 if unable to detect
#[must_use]
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(80, |(w, _)| usize::from(w))
}

/// Truncate a string to `max_len` characters, adding "..." if truncated
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if max_len <= 3 {
        return ".".repeat(max_len.min(3));
    }
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Renders a tree with box-drawing guides, directories first in colour.
#[must_use]
pub fn render_tree(node: &FileTreeNode, colors: &ColorConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", colors.blue(&node.path));
    if let Some(children) = &node.children {
        render_children(children, "", colors, &mut out);
    }
    out
}

fn render_children(children: &[FileTreeNode], prefix: &str, colors: &ColorConfig, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        let label = match child.node_type {
            NodeType::Directory => colors.blue(&format!("{}/", child.name)),
            NodeType::File => child.name.clone(),
        };
        let _ = writeln!(out, "{prefix}{branch}{label}");

        if let Some(grandchildren) = &child.children {
            let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
            render_children(grandchildren, &nested, colors, out);
        }
    }
}

/// Column width configuration for the recent projects table
#[derive(Debug)]
pub struct ColumnWidths {
    /// Row number column.
    pub row_num: usize,
    /// Project name column.
    pub name: usize,
    /// Root path column.
    pub root: usize,
    /// Timestamp column.
    pub opened: usize,
}

impl ColumnWidths {
    /// Calculate column widths based on terminal width
    /// Columns: # | NAME | ROOT | LAST OPENED
    #[must_use]
    pub fn calculate(term_width: usize) -> Self {
        let row_num = 3;
        let opened = 20; // "2026-01-01 12:00:00Z"
        let min_name = 16;
        let min_root = 24;

        // Reserve space for separators (3 spaces between columns)
        let flexible_space = term_width.saturating_sub(row_num + opened + 3);
        let extra = flexible_space.saturating_sub(min_name + min_root);

        // Distribute extra space primarily to the root path
        Self {
            row_num,
            name: min_name + extra / 4,
            root: min_root + extra - extra / 4,
            opened,
        }
    }
}

/// Renders the recent projects history as a table.
#[must_use]
pub fn render_recent(projects: &[RecentProject], colors: &ColorConfig, term_width: usize) -> String {
    if projects.is_empty() {
        return colors.dim("No recent projects\n");
    }
    let w = ColumnWidths::calculate(term_width);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<rn$} {:<nw$} {:<rw$} {}",
        "#",
        "NAME",
        "ROOT",
        "LAST OPENED",
        rn = w.row_num,
        nw = w.name,
        rw = w.root,
    );
    for (i, project) in projects.iter().enumerate() {
        let name = truncate(&project.name, w.name);
        let root = truncate(&project.root_path, w.root);
        let opened = project.last_opened.format("%Y-%m-%d %H:%M:%SZ").to_string();
        let _ = writeln!(
            out,
            "{:<rn$} {} {:<rw$} {}",
            i + 1,
            colors.cyan(&format!("{name:<nw$}", nw = w.name)),
            root,
            colors.dim(&opened),
            rn = w.row_num,
            rw = w.root,
        );
    }
    out
}

/// Renders loaded projects, one per line with their configurations below.
#[must_use]
pub fn render_projects(projects: &[ProjectSummary], colors: &ColorConfig) -> String {
    if projects.is_empty() {
        return colors.dim("No projects\n");
    }
    let mut out = String::new();
    for project in projects {
        let _ = writeln!(
            out,
            "{}  {}",
            colors.cyan(&project.name),
            colors.dim(&project.root_path)
        );
        for filepath in &project.filepaths {
            let _ = writeln!(out, "    {filepath}");
        }
    }
    out
}
