mod export;
mod hosts;
mod prompt;
mod rank;
mod table;

pub use export::{json_summary, write_addresses, write_csv};
pub use hosts::{
    offer_hosts_update, references_host, rewrite_hosts, system_hosts_path, update_hosts_file,
    HostsError, HostsUpdate, LINE_SEPARATOR,
};
pub use prompt::{confirm, parse_answer};
pub use rank::{best, rank};
pub use table::{print_summary, render_table, TOP_K};
