//! Variable commands related to time (`\year`, `\month`, `\day`, `\time`).

use setlang::traits::*;
use setlang::*;

/// Component for storing state related to the time commands.
pub struct Component {
    minutes_since_midnight: i32,
    day: i32,
    month: i32,
    year: i32,
}

impl Component {
    /// Create a new component with the variables initialized to the current
    /// time.
    #[cfg(feature = "time")]
    pub fn new() -> Component {
        use chrono::prelude::*;
        let dt: DateTime<Local> = Local::now();
        Component {
            minutes_since_midnight: 60 * (dt.time().hour() as i32) + (dt.time().minute() as i32),
            day: dt.day() as i32,
            month: dt.month() as i32,
            year: dt.year(),
        }
    }

    #[cfg(not(feature = "time"))]
    pub fn new() -> Component {
        Component {
            minutes_since_midnight: 0,
            day: 0,
            month: 0,
            year: 0,
        }
    }

    /// Create a new component with the variables initialized to the
    /// provided values.
    ///
    /// Useful in contexts where the system clock cannot be read, and in
    /// tests that need a deterministic date.
    pub fn new_with_values(
        minutes_since_midnight: i32,
        day: i32,
        month: i32,
        year: i32,
    ) -> Component {
        Component {
            minutes_since_midnight,
            day,
            month,
            year,
        }
    }
}

impl Default for Component {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the `\time` command.
pub fn get_time<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().minutes_since_midnight },
        |state: &mut S, _: variable::Index| -> &mut i32 {
            &mut state.component_mut().minutes_since_midnight
        },
    )
    .into()
}

/// Get the `\day` command.
pub fn get_day<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().day },
        |state: &mut S, _: variable::Index| -> &mut i32 { &mut state.component_mut().day },
    )
    .into()
}

/// Get the `\month` command.
pub fn get_month<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().month },
        |state: &mut S, _: variable::Index| -> &mut i32 { &mut state.component_mut().month },
    )
    .into()
}

/// Get the `\year` command.
pub fn get_year<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    variable::Command::new_singleton(
        |state: &S, _: variable::Index| -> &i32 { &state.component().year },
        |state: &mut S, _: variable::Index| -> &mut i32 { &mut state.component_mut().year },
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::the;
    use setlang_testing::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct State {
        time: Component,
        testing: TestingComponent,
    }

    impl SetlangState for State {
        fn recoverable_error_hook(
            vm: &vm::VM<Self>,
            recoverable_error: Box<error::Error>,
        ) -> Result<(), Box<error::Error>> {
            TestingComponent::recoverable_error_hook(vm, recoverable_error)
        }
    }

    vm::implement_has_component![State {
        time: Component,
        testing: TestingComponent,
    }];

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("the", the::get_the()),
            ("time", get_time()),
            ("day", get_day()),
            ("month", get_month()),
            ("year", get_year()),
        ])
    }

    fn fixed_date(vm: &mut vm::VM<State>) {
        vm.state.time = Component::new_with_values(123, 17, 6, 2024);
    }

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::CustomVMInitialization(fixed_date),
        ),
        expansion_equality_tests(
            (the_time, r"\the\time", "123"),
            (the_day, r"\the\day", "17"),
            (the_month, r"\the\month", "6"),
            (the_year, r"\the\year", "2024"),
            (time_is_assignable, r"\year=1984 \the\year", "1984"),
        ),
    ];
}
