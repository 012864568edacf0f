//! Todo list with draft updates persisted to a JSON file

use serde::{Deserialize, Serialize};
use tinstore::middleware::{draft, persist, FileStorage, PersistOptions};
use tinstore::{Action, State, Store, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    id: i64,
    title: String,
    completed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TodoList {
    todos: Vec<Todo>,
    filter: String,
}

fn todos(dir: &std::path::Path) -> Store {
    Store::new(
        |set, _get, _api| {
            let toggle = set.clone();
            let initial = TodoList {
                todos: Vec::new(),
                filter: "all".to_string(),
            };
            State::from_serialize(&initial)
                .unwrap_or_default()
                .with(
                    "add",
                    Action::new(move |title: Value| {
                        let title = title.as_str().unwrap_or_default().to_owned();
                        set.mutate(move |d| {
                            if let Some(todos) = d.get_mut("todos").and_then(Value::as_list_mut) {
                                let id = todos.len() as i64;
                                todos.push_back(
                                    State::new()
                                        .with("id", id)
                                        .with("title", title.as_str())
                                        .with("completed", false)
                                        .into(),
                                );
                            }
                        })
                    }),
                )
                .with(
                    "toggle",
                    Action::new(move |id: Value| {
                        let Some(id) = id.as_int() else { return };
                        toggle.mutate(move |d| {
                            let Some(todos) = d.get_mut("todos").and_then(Value::as_list_mut) else {
                                return;
                            };
                            for todo in todos.iter_mut() {
                                if todo.get("id").and_then(Value::as_int) == Some(id) {
                                    if let Some(todo) = todo.as_map_mut() {
                                        let done = todo.get("completed").and_then(Value::as_bool);
                                        todo.insert("completed", !done.unwrap_or(false));
                                    }
                                }
                            }
                        })
                    }),
                )
        },
        vec![
            draft(),
            persist(PersistOptions::new("todos").with_storage(FileStorage::new(dir))),
        ],
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Persisted Todos ===\n");

    let dir = std::env::temp_dir().join("tinstore-todos-demo");
    let store = todos(&dir);

    store.subscribe(|state| {
        let pending = state
            .get("todos")
            .and_then(Value::as_list)
            .map(|todos| {
                todos
                    .iter()
                    .filter(|t| t.get("completed").and_then(Value::as_bool) == Some(false))
                    .count()
            })
            .unwrap_or(0);
        println!("   [State] {pending} pending");
    });

    let before: TodoList = store.get_state().decode()?;
    println!("1. Loaded {} todos from {}", before.todos.len(), dir.display());

    println!("\n2. Adding todos");
    store.get_state().call_with("add", "Learn tinstore")?;
    store.get_state().call_with("add", "Write a middleware")?;

    println!("\n3. Toggling the first one");
    store.get_state().call_with("toggle", before.todos.len() as i64)?;

    let after: TodoList = store.get_state().decode()?;
    for todo in &after.todos {
        let mark = if todo.completed { "x" } else { " " };
        println!("   [{mark}] {} {}", todo.id, todo.title);
    }
    println!("\nRun again to see the list restored from disk.");
    Ok(())
}
