use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitplan_core::service::FitService;

use super::helpers::{check_mark, parse_date, truncate};

pub(crate) fn cmd_tasks(
    svc: &FitService,
    user_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let tasks = svc.tasks_for_date(user_id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct TaskRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Done")]
        done: String,
        #[tabled(rename = "Due")]
        due: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Task")]
        title: String,
    }

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|t| TaskRow {
            id: t.id,
            done: format!("[{}]", check_mark(t.completed)),
            due: t.due_at.format("%H:%M").to_string(),
            kind: t.kind.to_string(),
            title: truncate(&t.title, 45),
        })
        .collect();

    println!("\n  Tasks for {}\n", date.format("%A, %Y-%m-%d"));
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let done = tasks.iter().filter(|t| t.completed).count();
    println!("\n  {done}/{} completed", tasks.len());
    Ok(())
}

pub(crate) fn cmd_done(svc: &FitService, user_id: &str, id: i64, undo: bool, json: bool) -> Result<()> {
    let task = svc.set_task_completed(user_id, id, !undo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else if task.completed {
        println!("Completed: {} ({})", task.title, task.date);
    } else {
        println!("Reopened: {} ({})", task.title, task.date);
    }
    Ok(())
}
