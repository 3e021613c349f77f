/// **(internal)** Scenario 1: define-before-use over a nested
/// assignment-statement grammar.
mod _test_define_before_use;

/// **(internal)** Scenario 2: CSV-style records with a shared, existentially
/// chosen column count.
mod _test_csv_equal_columns;

/// **(internal)** Scenario 3: XML-style balanced tags.
mod _test_xml_balanced_tags;

/// **(internal)** Scenario 4: `count` direct evaluation (true/false/grow).
mod _test_count_predicate;

/// **(internal)** Scenario 5: an UNSAT search over a one-string language.
mod _test_unsat;

/// **(internal)** Scenario 6: CLI weight-vector validation.
mod _test_weight_vector_validation;
