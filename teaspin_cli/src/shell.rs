use tokio::io::{AsyncBufReadExt, BufReader};

use teaspin_core::{
    Category, FileSnapshotStore, ItemId, ItemStore, ManagerAction, ManagerView, SlotMachine,
};

use crate::{parse_category, print_advisory};

const HELP: &str = "\
commands:
  spin                 spin the reel
  reel                 show what is loaded on the reel
  open                 open the item manager
  pick <category>      show one category (black_tea, green_tea, cold_dew, other)
  back                 back to the category list
  close                close the item manager
  add <name>           add a drink to the category in view
  remove <id>          delete a drink from the library
  load <id>            put a drink from the category in view on the reel
  unload <position>    take one entry off the reel
  quit";

#[derive(Debug, PartialEq)]
enum Line {
    Help,
    Spin,
    Reel,
    Open,
    Pick(Category),
    Back,
    Close,
    Add(String),
    Remove(ItemId),
    Load(ItemId),
    Unload(usize),
    Quit,
}

fn argument<'a>(word: &str, rest: &'a str, what: &str) -> anyhow::Result<&'a str> {
    if rest.is_empty() {
        anyhow::bail!("{word} needs {what}");
    }
    Ok(rest)
}

fn parse_line(line: &str) -> anyhow::Result<Option<Line>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let need = |what: &str| argument(word, rest, what);
    let parsed = match word {
        "help" | "?" => Line::Help,
        "spin" => Line::Spin,
        "reel" => Line::Reel,
        "open" => Line::Open,
        "pick" => Line::Pick(parse_category(need("a category")?)?),
        "back" => Line::Back,
        "close" => Line::Close,
        "add" => Line::Add(need("a name")?.to_string()),
        "remove" => Line::Remove(ItemId::new(need("an id")?)),
        "load" => Line::Load(ItemId::new(need("an id")?)),
        "unload" => Line::Unload(need("a position")?.parse()?),
        "quit" | "exit" => Line::Quit,
        other => anyhow::bail!("unknown command {other:?}; try help"),
    };
    Ok(Some(parsed))
}

fn prompt(view: ManagerView) -> String {
    match view {
        ManagerView::Closed => "teaspin> ".to_string(),
        ManagerView::CategorySelect => "teaspin/manager> ".to_string(),
        ManagerView::CategoryDetail(category) => format!("teaspin/manager/{category}> "),
    }
}

fn guard(view: ManagerView, action: ManagerAction) -> anyhow::Result<()> {
    if !view.permits(action) {
        anyhow::bail!("not available here; open the manager and pick a category first");
    }
    Ok(())
}

async fn show_manager<S: ItemStore>(
    machine: &SlotMachine<S, FileSnapshotStore>,
    view: ManagerView,
) {
    match view {
        ManagerView::Closed => {}
        ManagerView::CategorySelect => {
            for category in Category::ALL {
                let count = machine.shelf(category).await.len();
                println!("  {category:<10} {count} drinks");
            }
        }
        ManagerView::CategoryDetail(category) => {
            let reel = machine.active_set().await;
            for item in machine.shelf(category).await {
                let loaded = reel.iter().filter(|entry| entry.id == item.id).count();
                println!("  {}  {}  (on reel x{loaded})", item.id, item.name);
            }
        }
    }
}

async fn execute<S: ItemStore>(
    machine: &SlotMachine<S, FileSnapshotStore>,
    view: &mut ManagerView,
    line: Line,
) -> anyhow::Result<()> {
    match line {
        Line::Help => println!("{HELP}"),
        Line::Spin => match machine.spin().await {
            Some(handle) => match handle.landed().await {
                Some(item) => println!("result: {}", item.name),
                None => anyhow::bail!("the reel stopped without a result"),
            },
            None => println!("nothing to spin; load some drinks first"),
        },
        Line::Reel => {
            for (index, item) in machine.active_set().await.iter().enumerate() {
                println!("{index:>3}  {}", item.name);
            }
            print_advisory(machine.advisory().await);
        }
        Line::Open | Line::Pick(_) | Line::Back | Line::Close => {
            let moved = match line {
                Line::Open => view.open(),
                Line::Pick(category) => view.pick(category),
                Line::Back => view.back(),
                _ => view.close(),
            };
            if !moved {
                anyhow::bail!("can't do that from here");
            }
            show_manager(machine, *view).await;
        }
        Line::Add(name) => {
            guard(*view, ManagerAction::AddToLibrary)?;
            let item = machine.add_to_core_library(&name, view.category()).await?;
            println!("added {} ({})", item.name, item.id);
        }
        Line::Remove(id) => {
            guard(*view, ManagerAction::RemoveFromLibrary)?;
            let purged = machine.remove_from_core_library(&id).await?;
            println!("removed; {purged} reel entries went with it");
            print_advisory(machine.advisory().await);
        }
        Line::Load(id) => {
            guard(*view, ManagerAction::AddToActive)?;
            let category = view.category();
            let item = machine
                .core_library()
                .await
                .into_iter()
                .find(|item| item.id == id && Some(item.shelf()) == category)
                .ok_or(teaspin_core::ReelError::InvalidReference(id))?;
            machine.add_to_active_set(&item).await?;
            println!("loaded {}", item.name);
            print_advisory(machine.advisory().await);
        }
        Line::Unload(index) => {
            guard(*view, ManagerAction::RemoveFromActive)?;
            let item = machine.remove_from_active_set(index).await?;
            println!("unloaded {}", item.name);
        }
        Line::Quit => {}
    }
    Ok(())
}

pub async fn run<S: ItemStore>(machine: &SlotMachine<S, FileSnapshotStore>) -> anyhow::Result<()> {
    let mut view = ManagerView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("type help for commands");
    loop {
        eprint!("{}", prompt(view));
        let Some(raw) = lines.next_line().await? else {
            break;
        };
        let line = match parse_line(&raw) {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        if line == Line::Quit {
            break;
        }
        if let Err(err) = execute(machine, &mut view, line).await {
            eprintln!("error: {err}");
        }
    }
    Ok(())
}
