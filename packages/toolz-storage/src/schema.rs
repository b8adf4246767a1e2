pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_contexts.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_contexts.sql")),
				"tables/002_todo_snapshots.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_todo_snapshots.sql")),
				_ => {
					out.push_str(line);
					out.push('\n');

					continue;
				},
			}

			out.push('\n');

			continue;
		}

		out.push_str(line);
		out.push('\n');
	}

	out
}

/// Splits rendered SQL into individual statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}
