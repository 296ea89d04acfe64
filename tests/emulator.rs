use vm_translator::emulator::{EmulatorError, ExecutionLimits, Halt, Machine};

fn run(source: &str) -> Machine {
    let mut machine = Machine::load(source).expect("program should load");
    let halt = machine.run().expect("program should run");
    assert_eq!(halt, Halt::EndOfProgram);
    machine
}

#[test]
fn executes_a_straight_line_program() {
    let machine = run("@2\nD=A\n@3\nD=D+A\n@0\nM=D");
    assert_eq!(machine.ram(0), 5);
}

#[test]
fn tolerates_comments_and_whitespace() {
    let machine = run("// sum two constants\n  @2 \n D = A  // load\n\n@3\nD=D+A\n@0\nM=D\n");
    assert_eq!(machine.ram(0), 5);
}

#[test]
fn assigns_variable_addresses_in_first_use_order() {
    let machine = run("@beta\nM=1\n@alpha\nM=1");
    assert_eq!(machine.symbol("beta"), Some(16));
    assert_eq!(machine.symbol("alpha"), Some(17));
    assert_eq!(machine.ram(16), 1);
    assert_eq!(machine.ram(17), 1);
}

#[test]
fn labels_resolve_before_variables_are_allocated() {
    // The forward reference to (done) must become a jump target, never a
    // RAM variable, even though it is used before it is declared.
    let machine = run("@done\n0;JMP\n@999\nD=A\n(done)\n@result\nM=-1");
    assert_eq!(machine.symbol("done"), Some(4));
    assert_eq!(machine.symbol("result"), Some(16));
    assert_eq!(machine.ram(16), -1);
}

#[test]
fn predefined_registers_resolve_to_fixed_addresses() {
    let machine = run("@SP\nM=1\n@R13\nM=1\n@THAT\nM=1");
    assert_eq!(machine.ram(0), 1);
    assert_eq!(machine.ram(13), 1);
    assert_eq!(machine.ram(4), 1);
}

#[test]
fn spin_loop_exhausts_the_step_budget() {
    let limits = ExecutionLimits { max_steps: 100 };
    let mut machine =
        Machine::load_with_limits("(loop)\n@loop\n0;JMP", limits).expect("program should load");
    let halt = machine.run().expect("program should run");
    assert_eq!(halt, Halt::StepBudget);
    assert_eq!(machine.steps(), 100);
}

#[test]
fn duplicate_label_is_rejected_at_load() {
    let err = Machine::load("(twice)\nD=A\n(twice)\nD=A").expect_err("load must fail");
    assert!(matches!(err, EmulatorError::DuplicateLabel { .. }));
}

#[test]
fn unknown_mnemonic_is_rejected_at_load() {
    let err = Machine::load("D=Q").expect_err("load must fail");
    assert!(matches!(err, EmulatorError::UnrecognizedInstruction { .. }));
    assert!(err.to_string().contains("D=Q"));
}

#[test]
fn malformed_symbol_is_rejected_at_load() {
    let err = Machine::load("@2bad").expect_err("load must fail");
    assert!(matches!(err, EmulatorError::InvalidSymbol { .. }));
}

#[test]
fn constant_above_address_range_is_rejected_at_load() {
    let err = Machine::load("@40000").expect_err("load must fail");
    assert!(matches!(err, EmulatorError::ConstantOutOfRange { .. }));
}

#[test]
fn negative_memory_address_fails_the_run() {
    let mut machine = Machine::load("A=-1\nM=0").expect("program should load");
    let err = machine.run().expect_err("run must fail");
    assert!(matches!(err, EmulatorError::AddressOutOfRange(-1)));
}
